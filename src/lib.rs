pub mod logger;
pub mod multispectral;
