pub mod barrier_cm;
pub mod net_barrier;
