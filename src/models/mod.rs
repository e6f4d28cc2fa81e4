mod book;
mod genre;
mod review;
mod shelf;
mod tutorial;
mod user;

pub use book::{Book, BookResponse, GenreRef};
pub use genre::Genre;
pub use review::{Review, ReviewStatus};
pub use shelf::{Shelf, ShelfType};
pub use tutorial::Tutorial;
pub use user::{ReadingGoal, Role, User, UserResponse};
