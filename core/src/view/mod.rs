pub mod controller;
pub mod style;
pub mod toggles;

pub use controller::ViewController;
pub use style::{
    LabelStyle, LabelSwitcher, StyleController, StyleSurface, StyleSurfaceError, StyleToken,
    StyleTransition, SurfaceStyle, SwitchOutcome,
};
pub use toggles::{MapType, UnknownViewFlag, ViewFlag, ViewState};
