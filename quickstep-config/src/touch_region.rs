use knuffel::errors::DecodeError;

use crate::utils::non_empty;
use crate::FloatOrInt;

/// Sizes of the screen areas that start a system gesture, in px.
#[derive(knuffel::Decode, Debug, Clone, PartialEq)]
pub struct TouchRegion {
    #[knuffel(child, unwrap(argument), default = Self::default().navbar_bottom_gesture_size)]
    pub navbar_bottom_gesture_size: FloatOrInt<0, 1000>,
    #[knuffel(child, unwrap(argument), default = Self::default().navbar_landscape_size)]
    pub navbar_landscape_size: FloatOrInt<0, 1000>,
    #[knuffel(child, unwrap(argument), default = Self::default().assistant_width)]
    pub assistant_width: FloatOrInt<0, 1000>,
    #[knuffel(child, unwrap(argument), default = Self::default().window_corner_radius)]
    pub window_corner_radius: FloatOrInt<0, 1000>,
    /// Activity that swallows swipe-ups while it is in front.
    #[knuffel(child, unwrap(argument))]
    pub gesture_blocking_activity: Option<ComponentName>,
}

impl Default for TouchRegion {
    fn default() -> Self {
        Self {
            navbar_bottom_gesture_size: FloatOrInt(48.),
            navbar_landscape_size: FloatOrInt(48.),
            assistant_width: FloatOrInt(48.),
            window_corner_radius: FloatOrInt(40.),
            gesture_blocking_activity: None,
        }
    }
}

/// A `package/class` activity name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentName {
    pub package: String,
    pub class: String,
}

impl ComponentName {
    /// Parses `pkg/cls`, expanding a class that starts with `.` relative to the package.
    pub fn unflatten(s: &str) -> Option<Self> {
        let (package, class) = s.split_once('/')?;
        let package = non_empty(package)?;
        let class = non_empty(class)?;
        let class = if class.starts_with('.') {
            if class.len() == 1 {
                return None;
            }
            format!("{package}{class}")
        } else {
            class.to_owned()
        };

        Some(Self {
            package: package.to_owned(),
            class,
        })
    }
}

impl std::fmt::Display for ComponentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.package, self.class)
    }
}

impl<S: knuffel::traits::ErrorSpan> knuffel::DecodeScalar<S> for ComponentName {
    fn type_check(
        type_name: &Option<knuffel::span::Spanned<knuffel::ast::TypeName, S>>,
        ctx: &mut knuffel::decode::Context<S>,
    ) {
        if let Some(type_name) = &type_name {
            ctx.emit_error(DecodeError::unexpected(
                type_name,
                "type name",
                "no type name expected for this node",
            ));
        }
    }

    fn raw_decode(
        val: &knuffel::span::Spanned<knuffel::ast::Literal, S>,
        _ctx: &mut knuffel::decode::Context<S>,
    ) -> Result<Self, DecodeError<S>> {
        match &**val {
            knuffel::ast::Literal::String(ref s) => ComponentName::unflatten(s).ok_or_else(|| {
                DecodeError::conversion(val, "expected a component name like `pkg/.Class`")
            }),
            _ => Err(DecodeError::scalar_kind(
                knuffel::decode::Kind::String,
                val,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unflatten_keeps_absolute_class() {
        let name = ComponentName::unflatten("com.a/org.b.Main").unwrap();
        assert_eq!(name.package, "com.a");
        assert_eq!(name.class, "org.b.Main");
        assert_eq!(name.to_string(), "com.a/org.b.Main");
    }

    #[test]
    fn unflatten_rejects_bare_dot() {
        assert_eq!(ComponentName::unflatten("com.a/."), None);
    }
}
