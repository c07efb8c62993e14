// Default random number generator seed
pub const DEFAULT_SEED: u64 = 48_151_623;

// Gas constant in J/(mol K), used by the Metropolis criterion
pub const GAS_CONSTANT: f64 = 8.314;

// Scores are in kcal/mol, temperatures in K
pub const KCAL_TO_J: f64 = 1000.0;

// Indexing grid resolution and docking-site border
pub const DEFAULT_GRID_STEP: f64 = 0.5;
pub const DEFAULT_BORDER: f64 = 1.0;

// Default per-DoF mutation step sizes
pub const DEFAULT_TRANSLATION_STEP: f64 = 2.0;
pub const DEFAULT_ROTATION_STEP_DEG: f64 = 30.0;
pub const DEFAULT_DIHEDRAL_STEP_DEG: f64 = 30.0;

// A solvent model is enabled when its occupancy state exceeds this value
pub const OCCUPANCY_THRESHOLD: f64 = 0.5;

// Extra indexing pad for flexible receptor OH/NH3 tips (protons cannot move
// further than this between re-indexing)
pub const FLEX_RECEPTOR_PAD: f64 = 2.0;

// When a quaternion SLERP is considered linear and not spherical
pub const LINEAR_THRESHOLD: f64 = 0.9995;

// Sigma truncation multiplier for GA roulette-wheel fitness
pub const SIGMA_TRUNCATION: f64 = 2.0;

// Tournament-of-two win probability for GA parent selection
pub const TOURNAMENT_WIN_P: f64 = 0.7;

// Give up on tournament selection after this many attempts to find two
// distinct parents (uniform population)
pub const MAX_TOURNAMENT_ATTEMPTS: usize = 100;
