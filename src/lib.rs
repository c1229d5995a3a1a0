pub mod model;
pub mod record;
pub mod selection;
pub mod services;
pub mod widgets;

pub use model::{FieldAttrs, SelectOption, SelectionSource};
pub use record::{JsonRecord, Record};
pub use selection::keys::StaticKey;
pub use selection::SelectionResolver;
pub use services::remote::{CliRemote, Remote, RemoteError};
pub use widgets::combo::{ComboEvent, ComboWidget};
pub use widgets::popdown::{display_width, PopdownModel};
