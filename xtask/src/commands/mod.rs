pub use self::{check::*, dump::*, generate_header::*, import_header::*};

mod check;
mod dump;
mod generate_header;
mod import_header;
