//! The renderer settings snapshot carried by every tour stop
//!
//! Each field is one renderer toggle. A stop records a complete copy of
//! these at capture time and pushes them back to the engine on sync. All
//! fields are optional on read so older tours keep loading; anything
//! missing takes the default below.

use crate::xml::{parse_bool, XmlElement, XmlWriter};
use crate::Color;

trait SettingValue: Sized {
    fn write(&self, name: &str, w: &mut XmlWriter);
    fn read(el: &XmlElement, name: &str, default: Self) -> Self;
}

impl SettingValue for bool {
    fn write(&self, name: &str, w: &mut XmlWriter) {
        w.write_attribute_bool(name, *self);
    }
    fn read(el: &XmlElement, name: &str, default: Self) -> Self {
        el.attr(name).and_then(parse_bool).unwrap_or(default)
    }
}

impl SettingValue for i32 {
    fn write(&self, name: &str, w: &mut XmlWriter) {
        w.write_attribute(name, self);
    }
    fn read(el: &XmlElement, name: &str, default: Self) -> Self {
        el.attr_or(name, default)
    }
}

impl SettingValue for f64 {
    fn write(&self, name: &str, w: &mut XmlWriter) {
        w.write_attribute(name, self);
    }
    fn read(el: &XmlElement, name: &str, default: Self) -> Self {
        el.attr_or(name, default)
    }
}

impl SettingValue for Color {
    fn write(&self, name: &str, w: &mut XmlWriter) {
        w.write_attribute(name, self);
    }
    fn read(el: &XmlElement, name: &str, default: Self) -> Self {
        Color::parse_or(el.attr(name), default)
    }
}

impl SettingValue for String {
    fn write(&self, name: &str, w: &mut XmlWriter) {
        w.write_attribute_string(name, self);
    }
    fn read(el: &XmlElement, name: &str, default: Self) -> Self {
        el.attr(name).map(str::to_string).unwrap_or(default)
    }
}

macro_rules! settings {
    ($( $(#[$doc:meta])* $field:ident : $ty:ty = $default:expr => $xml:literal ),* $(,)?) => {
        /// Snapshot of the engine's renderer toggles
        #[derive(Debug, Clone, PartialEq)]
        pub struct Settings {
            $( $(#[$doc])* pub $field: $ty, )*
        }

        impl Default for Settings {
            fn default() -> Self {
                Self { $( $field: $default, )* }
            }
        }

        impl Settings {
            /// Attribute names in the order they are written
            pub const ATTRIBUTE_NAMES: &'static [&'static str] = &[$( $xml ),*];

            /// Writes every field as an attribute on the open element
            pub fn write_xml_attributes(&self, w: &mut XmlWriter) {
                $( SettingValue::write(&self.$field, $xml, w); )*
            }

            /// Reads every field, applying defaults for absent attributes
            pub fn from_xml_attributes(el: &XmlElement) -> Self {
                let defaults = Self::default();
                Self { $( $field: SettingValue::read(el, $xml, defaults.$field), )* }
            }
        }
    };
}

settings! {
    actual_planet_scale: bool = true => "ActualPlanetScale",
    show_clouds: bool = false => "ShowClouds",
    earth_cutaway_view: bool = false => "EarthCutawayView",
    show_constellation_boundries: bool = true => "ShowConstellationBoundries",
    show_constellation_figures: bool = true => "ShowConstellationFigures",
    show_constellation_selection: bool = true => "ShowConstellationSelection",
    show_constellation_pictures: bool = false => "ShowConstellationPictures",
    show_constellation_labels: bool = false => "ShowConstellationLabels",
    show_constellations: bool = true => "ShowConstellations",
    show_ecliptic: bool = false => "ShowEcliptic",
    show_elevation_model: bool = true => "ShowElevationModel",
    show_field_of_view: bool = false => "ShowFieldOfView",
    show_grid: bool = false => "ShowGrid",
    show_horizon: bool = false => "ShowHorizon",
    show_horizon_panorama: bool = false => "ShowHorizonPanorama",
    show_moons_as_point_source: bool = false => "ShowMoonsAsPointSource",
    show_solar_system: bool = true => "ShowSolarSystem",
    /// Index into the telescope list, 0 for none
    fov_telescope: i32 = 0 => "FovTelescope",
    fov_eyepiece: i32 = 0 => "FovEyepiece",
    fov_camera: i32 = 0 => "FovCamera",
    local_horizon_mode: bool = false => "LocalHorizonMode",
    galactic_mode: bool = false => "GalacticMode",
    fade_in_overlays: bool = true => "FadeInOverlays",
    solar_system_stars: bool = true => "SolarSystemStars",
    solar_system_milky_way: bool = true => "SolarSystemMilkyWay",
    solar_system_cosmos: bool = true => "SolarSystemCosmos",
    solar_system_cmb: bool = true => "SolarSystemCMB",
    solar_system_orbits: bool = true => "SolarSystemOrbits",
    solar_system_minor_orbits: bool = false => "SolarSystemMinorOrbits",
    solar_system_overlays: bool = true => "SolarSystemOverlays",
    solar_system_lighting: bool = true => "SolarSystemLighting",
    solar_system_scale: i32 = 1 => "SolarSystemScale",
    solar_system_multi_res: bool = true => "SolarSystemMultiRes",
    solar_system_minor_planets: bool = false => "SolarSystemMinorPlanets",
    solar_system_planets: bool = true => "SolarSystemPlanets",
    show_equatorial_grid_text: bool = false => "ShowEquatorialGridText",
    show_galactic_grid: bool = false => "ShowGalacticGrid",
    show_galactic_grid_text: bool = false => "ShowGalacticGridText",
    show_ecliptic_grid: bool = false => "ShowEclipticGrid",
    show_ecliptic_grid_text: bool = false => "ShowEclipticGridText",
    show_ecliptic_overview_text: bool = false => "ShowEclipticOverviewText",
    show_alt_az_grid: bool = false => "ShowAltAzGrid",
    show_alt_az_grid_text: bool = false => "ShowAltAzGridText",
    show_precession_chart: bool = false => "ShowPrecessionChart",
    show_sky_overlays: bool = true => "ShowSkyOverlays",
    show_sky_node: bool = true => "ShowSkyNode",
    show_sky_grids: bool = true => "ShowSkyGrids",
    show_sky_overlays_in_3d: bool = true => "ShowSkyOverlaysIn3d",
    show_earth_sky: bool = true => "ShowEarthSky",
    show_iss_model: bool = false => "ShowISSModel",
    milky_way_model: bool = false => "MilkyWayModel",
    /// Bit mask of minor planet families to draw
    minor_planets_filter: i32 = 255 => "MinorPlanetsFilter",
    /// Bit mask of planets whose orbits are drawn
    planet_orbits_filter: i32 = 255 => "PlanetOrbitsFilter",
    /// Semicolon-separated constellation abbreviations, empty for all
    constellation_figures_filter: String = String::new() => "ConstellationFiguresFilter",
    constellation_boundaries_filter: String = String::new() => "ConstellationBoundariesFilter",
    constellation_names_filter: String = String::new() => "ConstellationNamesFilter",
    constellation_art_filter: String = String::new() => "ConstellationArtFilter",
    constellation_boundry_color: Color =
        Color::from_rgb(100, 100, 20) => "ConstellationBoundryColor",
    constellation_selection_color: Color =
        Color::from_rgb(255, 255, 0) => "ConstellationSelectionColor",
    constellation_figure_color: Color = Color::from_rgb(80, 80, 160) => "ConstellationFigureColor",
    equatorial_grid_color: Color = Color::from_rgb(0, 0, 160) => "EquatorialGridColor",
    ecliptic_grid_color: Color = Color::from_rgb(0, 128, 0) => "EclipticGridColor",
    galactic_grid_color: Color = Color::from_rgb(128, 0, 128) => "GalacticGridColor",
    alt_az_grid_color: Color = Color::from_rgb(255, 165, 0) => "AltAzGridColor",
    precession_chart_color: Color = Color::from_rgb(255, 165, 0) => "PrecessionChartColor",
    ecliptic_color: Color = Color::from_rgb(0, 128, 0) => "EclipticColor",
    constellation_art_opacity: f64 = 0.5 => "ConstellationArtOpacity",
    /// Brightness of the planets relative to the default
    planet_brightness: f64 = 1.0 => "PlanetBrightness",
}
