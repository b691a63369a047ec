pub mod ancestry;
pub mod genetic_map;
pub mod marker;
pub mod params;
pub mod ref_gt_rec;
pub mod samples;
pub mod window;
