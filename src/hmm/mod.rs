pub mod emission;
pub mod forward_backward;
pub mod posterior;
pub mod tables;
pub mod transition;
