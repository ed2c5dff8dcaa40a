//! Physical constants (SI unless noted).

/// Speed of light in vacuum, m/s.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// `G * M_sun / c^3`: one solar mass expressed in seconds.
pub const MSUN_SECONDS: f64 = 4.925_490_947_641_267e-6;

/// One megaparsec in metres.
pub const MPC_METERS: f64 = 3.085_677_581_491_367e22;

/// WGS-84 Earth semi-major axis, m.
pub const EARTH_SEMI_MAJOR_AXIS: f64 = 6_378_137.0;

/// WGS-84 Earth semi-minor axis, m.
pub const EARTH_SEMI_MINOR_AXIS: f64 = 6_356_752.314;

/// Julian date of the GPS epoch (1980-01-06 00:00:00 UTC).
pub const GPS_EPOCH_JD: f64 = 2_444_244.5;

/// Julian date of J2000.0.
pub const J2000_JD: f64 = 2_451_545.0;
