pub mod stage0_index;
pub mod stage1_tag;
pub mod stage2_levels;
pub mod stage3_merge;
pub mod stage4_render;

pub use stage0_index::*;
pub use stage1_tag::*;
pub use stage2_levels::*;
pub use stage3_merge::*;
pub use stage4_render::*;
