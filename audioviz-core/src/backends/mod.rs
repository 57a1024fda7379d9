pub mod unsupported;
