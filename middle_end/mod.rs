pub mod cfg;
pub mod optimization;
pub mod ssa;
