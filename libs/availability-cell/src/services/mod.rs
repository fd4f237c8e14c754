pub mod windows;
pub mod slots;

pub use windows::WindowManagementService;
pub use slots::SlotGeneratorService;
