pub mod clinic;
pub mod email;
pub mod invitation;

pub use clinic::ClinicService;
pub use email::{EmailSender, ResendEmailSender};
pub use invitation::InvitationService;
