pub mod commentary;
pub mod icons;

pub use commentary::{CommentaryWriter, print_failure, print_watching};
