//! Mixer side of eqlink: the tunable controls of the shared control file as
//! named integer elements on a fixed 0-100 scale.

mod error;
pub mod scale;
mod surface;

pub use error::SurfaceError;
pub use surface::{
    control_name, ControlDescriptor, ControlSurface, ElemAttribute, ElemKey, ElemType,
    IntegerInfo, SurfaceIdentity, CONTROL_SUFFIX, DRIVER_NAME, MIXER_NAME,
};
