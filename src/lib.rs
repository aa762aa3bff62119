// Базовые модули
pub mod consts;
pub mod error;
pub mod config;
pub mod metrics;
pub mod status;
pub mod util; // src/util/mod.rs

// Порт и транспорт
pub mod lock;
pub mod stream;    // src/stream/{mod,serial}.rs
pub mod frame;
pub mod transport;
pub mod memory;    // src/memory/{mod,cache}.rs

// SLIP + link layer
pub mod slip;
pub mod link;      // src/link/{mod,message,session}.rs

// Декодер журнала и модель погружений
pub mod divelog;   // src/divelog/{mod,bits,version,header,record,footer,scan}.rs
pub mod dive;

// Драйверы
pub mod driver;    // src/driver/{mod,suunto,memomouse,shearwater}.rs

// Удобные реэкспорты
pub use config::{DriverConfig, TransportTiming};
pub use dive::{Dive, DiveCollection, LastKnownDive, Sample};
pub use driver::{driver_by_name, drivers, DeviceDriver, DriverInfo};
pub use error::{DecodeError, DeviceError, ErrorCategory, TransferError};
pub use memory::{MemoryImage, MemoryLayout, PageSource, PagedMemoryCache};
pub use status::{CancelToken, LogStatus, NullStatus, StatusSink};
pub use stream::{ByteStream, Connection, Connector, PortSettings, SerialConnector};
pub use transport::PacketTransport;
