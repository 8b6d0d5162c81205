// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Geographic math
//!
//! Great-circle distance for server sorting and the coarse country-code to
//! continent map used by catalog filters. Unmapped countries yield no
//! continent; invalid coordinates yield no distance. Neither is an error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Coordinates are acceptable when |lat| <= 90 and |lon| <= 180.
pub fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && latitude.abs() <= 90.0
        && longitude.abs() <= 180.0
}

/// Haversine great-circle distance in kilometers.
///
/// Returns `None` when either coordinate pair is out of range.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Option<f64> {
    if !valid_coordinates(lat1, lon1) || !valid_coordinates(lat2, lon2) {
        return None;
    }

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    Some(EARTH_RADIUS_KM * c)
}

/// Continents the catalog filter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Continent {
    NorthAmerica,
    SouthAmerica,
    Europe,
    Asia,
    Africa,
    Oceania,
}

impl Continent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Continent::NorthAmerica => "north-america",
            Continent::SouthAmerica => "south-america",
            Continent::Europe => "europe",
            Continent::Asia => "asia",
            Continent::Africa => "africa",
            Continent::Oceania => "oceania",
        }
    }
}

impl fmt::Display for Continent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Continent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "north-america" => Ok(Continent::NorthAmerica),
            "south-america" => Ok(Continent::SouthAmerica),
            "europe" => Ok(Continent::Europe),
            "asia" => Ok(Continent::Asia),
            "africa" => Ok(Continent::Africa),
            "oceania" => Ok(Continent::Oceania),
            other => Err(format!("unknown continent: {}", other)),
        }
    }
}

/// Continent for an ISO 3166-1 alpha-2 country code.
///
/// The map covers the countries the edge network actually operates in;
/// anything else returns `None` and never matches a continent filter.
pub fn continent_for_country(code: &str) -> Option<Continent> {
    let continent = match code {
        // North America (including Central America and the Caribbean).
        "US" | "CA" | "MX" | "GT" | "CR" | "PA" | "DO" | "PR" | "JM" | "TT" | "BB" | "BZ"
        | "HN" | "NI" | "SV" | "HT" | "CU" | "BS" | "KY" | "BM" => Continent::NorthAmerica,
        // South America.
        "BR" | "AR" | "CL" | "CO" | "PE" | "EC" | "VE" | "UY" | "PY" | "BO" | "GY" | "SR" => {
            Continent::SouthAmerica
        }
        // Europe.
        "GB" | "DE" | "FR" | "NL" | "ES" | "IT" | "PT" | "BE" | "CH" | "AT" | "IE" | "SE"
        | "NO" | "DK" | "FI" | "IS" | "PL" | "CZ" | "SK" | "HU" | "RO" | "BG" | "GR" | "HR"
        | "SI" | "RS" | "BA" | "MK" | "AL" | "EE" | "LV" | "LT" | "UA" | "MD" | "LU" | "MT"
        | "CY" | "RU" => Continent::Europe,
        // Asia (including the Middle East).
        "JP" | "KR" | "CN" | "HK" | "TW" | "SG" | "MY" | "TH" | "VN" | "PH" | "ID" | "IN"
        | "PK" | "BD" | "LK" | "NP" | "KH" | "LA" | "MM" | "MN" | "KZ" | "UZ" | "GE" | "AM"
        | "AZ" | "AE" | "SA" | "QA" | "KW" | "BH" | "OM" | "JO" | "LB" | "IL" | "TR" | "IQ" => {
            Continent::Asia
        }
        // Africa.
        "ZA" | "NG" | "KE" | "EG" | "MA" | "TN" | "DZ" | "GH" | "SN" | "CI" | "CM" | "UG"
        | "TZ" | "ZM" | "ZW" | "MZ" | "AO" | "BW" | "NA" | "RW" | "ET" | "MU" | "RE" | "DJ"
        | "LY" | "SD" => Continent::Africa,
        // Oceania.
        "AU" | "NZ" | "FJ" | "PG" | "NC" | "PF" | "GU" => Continent::Oceania,
        _ => return None,
    };
    Some(continent)
}
