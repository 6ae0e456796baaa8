mod bytes;
mod dotnet;
mod engine;
mod handle;
pub mod pattern;
pub mod provider;
mod reader;
pub mod region;
pub mod scan_window;

// Scripted address spaces and processes, shared by unit and integration tests
#[doc(hidden)]
pub mod mock;

pub use bytes::{ByteBuffer, decode_utf16le};
pub use dotnet::DictionaryEntry;
pub use engine::MemoryEngine;
pub use handle::{OsProcess, SystemProcessProvider};
pub use pattern::Signature;
pub use provider::{Architecture, ProcessInfo, ProcessProvider};
pub use reader::ReadMemory;
pub use region::{MemoryRegion, RegionFilter, RegionKind};
pub use scan_window::{DEFAULT_SCAN_CHUNK, ScanWindow, ScanWindows};

#[doc(hidden)]
pub use mock::{MockMemoryBuilder, MockMemoryReader, MockProcess, MockProvider};
