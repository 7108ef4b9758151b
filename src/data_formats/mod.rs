mod post_form;
mod request;
mod response;

pub use post_form::*;
pub use request::*;
pub use response::*;
