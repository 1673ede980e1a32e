//! One route per commercial category.

use crate::domain::{Route, TrainKind};

const DEFAULT_COLOR: &str = "DE4E4E";
const TEXT_COLOR: &str = "FFFFFF";

/// GTFS route types used in the feed.
const RAIL: u8 = 2;
const BUS: u8 = 3;

fn color_for(label: &str) -> &'static str {
    match label {
        "TLK" => "8505A3",
        "IC" => "F25E18",
        "IC EIC" | "EIC" => "898989",
        "EC" => "9D740F",
        "EIP" => "002664",
        "EN" => "000000",
        _ => DEFAULT_COLOR,
    }
}

/// The route for trains sold under `label`.
pub fn route_for(label: &str, kind: &TrainKind) -> Route {
    Route {
        id: label.to_string(),
        short_name: label.to_string(),
        route_type: if kind.is_bus() { BUS } else { RAIL },
        color: color_for(label).to_string(),
        text_color: TEXT_COLOR.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_categories() {
        let tlk = route_for("TLK", &TrainKind::Conventional);
        assert_eq!(tlk.id, "TLK");
        assert_eq!(tlk.color, "8505A3");
        assert_eq!(tlk.route_type, 2);

        assert_eq!(route_for("IC EIC", &TrainKind::Express).color, "898989");
    }

    #[test]
    fn replacement_bus() {
        let kind = TrainKind::from_label("ZKA IC");
        let route = route_for("ZKA IC", &kind);
        assert_eq!(route.route_type, 3);
        assert_eq!(route.color, DEFAULT_COLOR);
        assert_eq!(route.text_color, "FFFFFF");
    }
}
