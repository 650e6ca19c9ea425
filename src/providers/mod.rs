pub mod cal_provider;

pub use cal_provider::CalProvider;
