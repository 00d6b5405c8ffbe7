pub mod load_queue;

pub use load_queue::{DestHandoff, LoadJob, LoadQueue};
