#[macro_export]
macro_rules! debug_log {
	($($arg:tt)*) => {{
		#[cfg(debug_assertions)]
		{
			eprintln!($($arg)*);
		}
	}};
}

pub mod batch;
pub mod config;
pub mod describe;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod lang;
pub mod log;
pub mod scanner;
pub mod server;

pub use batch::{BatchOutput, BatchProcessor, UploadedFile};
pub use config::{load_config, Config};
pub use dispatch::{dispatch, FileReport};
pub use error::{MapError, MapResult};
pub use graph::{CallEdge, CallGraph, FunctionNode};
pub use lang::{list_functions, FunctionSummary};
