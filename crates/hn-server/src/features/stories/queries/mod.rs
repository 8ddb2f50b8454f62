pub mod get;
pub mod list;
pub mod top_authors;

pub use get::{GetStoryError, GetStoryQuery};
pub use list::{ListStoriesError, ListStoriesQuery, ListStoriesResponse};
pub use top_authors::AuthorScore;
