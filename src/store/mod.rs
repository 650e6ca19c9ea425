pub mod disk;
pub mod memory;

pub use disk::CsvPriceStore;
pub use memory::MemoryPriceStore;
