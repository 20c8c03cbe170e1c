pub mod chunk;
pub mod combine;
pub mod extract;
pub mod run;
pub mod score;
