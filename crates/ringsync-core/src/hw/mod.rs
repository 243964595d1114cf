pub mod cq;
pub mod doorbell;
pub mod rx;
pub mod tx;

pub use cq::{CompletionQueue, Cqe};
pub use doorbell::{CountingDoorbell, Doorbell, DoorbellProbe};
#[cfg(target_os = "linux")]
pub use doorbell::MmioDoorbell;
pub use rx::{HwRxRing, RxDesc};
pub use tx::{CtrlSeg, DataSeg, HwTxRing, TxDesc};
