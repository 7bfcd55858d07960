pub mod normalize;
pub mod numeric;
pub mod tags;
