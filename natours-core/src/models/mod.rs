pub mod booking;
pub mod review;
pub mod tour;
pub mod user;

pub use booking::{Booking, BookingDetails, NewBooking};
pub use review::{Review, ReviewWithAuthor};
pub use tour::{Difficulty, Tour, TourStats, TourWithReviews};
pub use user::{Role, User, UserResponse};
