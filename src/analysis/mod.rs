pub mod contours;
pub mod headway;
pub mod observations;
pub mod outliers;
pub mod signal;
pub mod travel_time;
pub mod volumes;
