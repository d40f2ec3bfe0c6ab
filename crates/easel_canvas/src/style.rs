//! Canvas style keywords and their canonical wire names.

use std::fmt;

macro_rules! keyword_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Canonical keyword understood by the remote context.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $wire ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

keyword_enum! {
    /// Horizontal text alignment relative to the drawing position.
    TextAlign {
        #[default]
        Start => "start",
        End => "end",
        Left => "left",
        Right => "right",
        Center => "center",
    }
}

keyword_enum! {
    /// Text direction.
    TextDirection {
        Ltr => "ltr",
        Rtl => "rtl",
        #[default]
        Inherit => "inherit",
    }
}

keyword_enum! {
    /// Vertical text baseline.
    TextBaseline {
        Top => "top",
        Hanging => "hanging",
        Middle => "middle",
        #[default]
        Alphabetic => "alphabetic",
        Ideographic => "ideographic",
        Bottom => "bottom",
    }
}

keyword_enum! {
    /// Shape used at the ends of lines.
    LineCap {
        #[default]
        Butt => "butt",
        Round => "round",
        Square => "square",
    }
}

keyword_enum! {
    /// Shape used where two segments meet.
    LineJoin {
        #[default]
        Miter => "miter",
        Round => "round",
        Bevel => "bevel",
    }
}

keyword_enum! {
    /// Tiling of a pattern.
    RepeatPattern {
        #[default]
        Repeat => "repeat",
        RepeatX => "repeat-x",
        RepeatY => "repeat-y",
        NoRepeat => "no-repeat",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_remote_defaults() {
        assert_eq!(TextAlign::default().as_str(), "start");
        assert_eq!(TextDirection::default().as_str(), "inherit");
        assert_eq!(TextBaseline::default().as_str(), "alphabetic");
        assert_eq!(LineCap::default().as_str(), "butt");
        assert_eq!(LineJoin::default().as_str(), "miter");
        assert_eq!(RepeatPattern::default().as_str(), "repeat");
    }

    #[test]
    fn test_repeat_keywords_are_hyphenated() {
        let names: Vec<String> = RepeatPattern::ALL.iter().map(|r| r.to_string()).collect();
        assert_eq!(names, ["repeat", "repeat-x", "repeat-y", "no-repeat"]);
    }
}
