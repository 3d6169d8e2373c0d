mod kwh;
mod pence;
mod volume;

pub use kwh::KiloWattHours;
pub use pence::Pence;
pub use volume::CubicMeters;
