//! F1 circuits and their coordinates.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Track {
    pub id: &'static str,
    pub name: &'static str,
    pub country: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

const fn track(
    id: &'static str,
    name: &'static str,
    country: &'static str,
    latitude: f64,
    longitude: f64,
) -> Track {
    Track {
        id,
        name,
        country,
        latitude,
        longitude,
    }
}

static TRACKS: &[Track] = &[
    track("albert_park", "Albert Park Circuit", "Australia", -37.8497, 144.968),
    track("shanghai", "Shanghai International Circuit", "China", 31.3389, 121.22),
    track("suzuka", "Suzuka Circuit", "Japan", 34.8431, 136.541),
    track("bahrain", "Bahrain International Circuit", "Bahrain", 26.0325, 50.5106),
    track("jeddah", "Jeddah Corniche Circuit", "Saudi Arabia", 21.6319, 39.1044),
    track("miami", "Miami International Autodrome", "USA", 25.9581, -80.2389),
    track("imola", "Autodromo Enzo e Dino Ferrari", "Italy", 44.3439, 11.7167),
    track("monaco", "Circuit de Monaco", "Monaco", 43.7347, 7.42056),
    track("catalunya", "Circuit de Barcelona-Catalunya", "Spain", 41.57, 2.26111),
    track("villeneuve", "Circuit Gilles Villeneuve", "Canada", 45.5, -73.5228),
    track("red_bull_ring", "Red Bull Ring", "Austria", 47.2197, 14.7647),
    track("silverstone", "Silverstone Circuit", "UK", 52.0786, -1.01694),
    track("spa", "Circuit de Spa-Francorchamps", "Belgium", 50.4372, 5.97139),
    track("hungaroring", "Hungaroring", "Hungary", 47.5789, 19.2486),
    track("zandvoort", "Circuit Park Zandvoort", "Netherlands", 52.3888, 4.54092),
    track("monza", "Autodromo Nazionale di Monza", "Italy", 45.6156, 9.28111),
    track("baku", "Baku City Circuit", "Azerbaijan", 40.3725, 49.8533),
    track("marina_bay", "Marina Bay Street Circuit", "Singapore", 1.2914, 103.864),
    track("americas", "Circuit of the Americas", "USA", 30.1328, -97.6411),
    track("rodriguez", "Autodromo Hermanos Rodriguez", "Mexico", 19.4042, -99.0907),
    track("interlagos", "Autodromo Jose Carlos Pace", "Brazil", -23.7036, -46.6997),
    track("vegas", "Las Vegas Strip Street Circuit", "USA", 36.1147, -115.173),
    track("losail", "Losail International Circuit", "Qatar", 25.49, 51.4542),
    track("yas_marina", "Yas Marina Circuit", "UAE", 24.4672, 54.6031),
];

/// Every circuit in the catalog
pub fn all_tracks() -> &'static [Track] {
    TRACKS
}

/// Case-insensitive lookup by id (e.g. `"monaco"`, `"Red_Bull_Ring"`)
pub fn find_track(id: &str) -> Option<&'static Track> {
    let id = id.trim();
    TRACKS.iter().find(|t| t.id.eq_ignore_ascii_case(id))
}
