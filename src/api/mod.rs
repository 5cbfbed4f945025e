pub mod apex;

pub use apex::ApexPublicClient;
