use arcstr::ArcStr;

/// Read counts and realized depths.
pub type CountType = u64;
/// Values of computed statistics.
pub type StatType = f64;
/// Shared, cheaply clonable label (sample ids, genotypes, group values).
pub type LabelStr = ArcStr;
/// Index of an iteration or round within a bootstrap run.
pub type IterType = u32;
