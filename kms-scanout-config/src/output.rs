use std::str::FromStr;

#[derive(knuffel::Decode, Debug, Default, Clone, PartialEq)]
pub struct Output {
    #[knuffel(child, unwrap(argument, str))]
    pub mode: Option<ConfiguredMode>,
    /// Top-left corner of the scanout rectangle on the CRTC.
    #[knuffel(child)]
    pub position: Option<Position>,
    /// Scanout rectangle size; defaults to the size of the picked mode.
    #[knuffel(child)]
    pub size: Option<Size>,
}

#[derive(knuffel::Decode, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    #[knuffel(property)]
    pub x: i32,
    #[knuffel(property)]
    pub y: i32,
}

#[derive(knuffel::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    #[knuffel(argument)]
    pub width: u32,
    #[knuffel(argument)]
    pub height: u32,
}

/// Output mode as written in the config: `WIDTHxHEIGHT[@REFRESH]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfiguredMode {
    pub width: u16,
    pub height: u16,
    pub refresh: Option<f64>,
}

impl FromStr for ConfiguredMode {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((width, rest)) = s.split_once('x') else {
            return Err("no 'x' separator found");
        };

        let (height, refresh) = match rest.split_once('@') {
            Some((height, refresh)) => (height, Some(refresh)),
            None => (rest, None),
        };

        let width = width.parse().map_err(|_| "error parsing width")?;
        let height = height.parse().map_err(|_| "error parsing height")?;
        let refresh = refresh
            .map(str::parse::<f64>)
            .transpose()
            .map_err(|_| "error parsing refresh rate")?;

        if let Some(refresh) = refresh {
            if !refresh.is_finite() || refresh <= 0. {
                return Err("refresh rate must be a positive number");
            }
        }

        Ok(Self {
            width,
            height,
            refresh,
        })
    }
}
