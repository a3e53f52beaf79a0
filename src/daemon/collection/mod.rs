pub mod monitor;
pub mod sampler;
