pub mod page;
pub mod post;
pub mod target;

pub use page::{PageMeta, PageQuery, PageResult, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use post::{Membership, NewPost, Post, PostUpdate, ToggleKind, UserStats};
pub use target::FeedTarget;
