pub mod dbscan;
pub mod mti;
pub mod oscfar;
pub mod ppfft;

pub use dbscan::{Dbscan, DbscanConfig};
pub use mti::{Mti, Mti2d, Mti2dC, Mti2dR};
pub use oscfar::{OsCfar, OsCfarConfig};
pub use ppfft::{Ppfft, PpfftConfig, PpfftInput};
