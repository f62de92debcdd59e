#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod fit;
pub use fit::fit_rigid_transform;

mod registration;
pub use registration::{IcpConfig, IcpRegistration, RegistrationError};
