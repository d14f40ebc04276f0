//! CLI command implementations.

pub(crate) mod blocks;
pub(crate) mod render;

pub(crate) use blocks::BlocksArgs;
pub(crate) use render::RenderArgs;
