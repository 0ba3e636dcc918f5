use knuffel::errors::DecodeError;

use crate::utils::parse_in_range;
use crate::FloatOrInt;

/// Thresholds that shape how a swipe is tracked and released.
///
/// Velocities are in px/s, distances in px.
#[derive(knuffel::Decode, Debug, Clone, PartialEq)]
pub struct Gestures {
    #[knuffel(child, unwrap(argument), default = Self::default().fling_threshold_velocity)]
    pub fling_threshold_velocity: FloatOrInt<0, 100000>,
    #[knuffel(child, unwrap(argument), default = Self::default().fling_min_velocity)]
    pub fling_min_velocity: FloatOrInt<0, 100000>,
    #[knuffel(child, unwrap(argument), default = Self::default().touch_slop)]
    pub touch_slop: FloatOrInt<0, 1000>,
    #[knuffel(child, unwrap(argument), default = Self::default().transition_drag_length)]
    pub transition_drag_length: FloatOrInt<0, 100000>,
    #[knuffel(child, unwrap(argument), default = Self::default().drag_length_factor)]
    pub drag_length_factor: FloatOrInt<1, 10>,
    #[knuffel(child, unwrap(argument), default = Self::default().single_frame_ms)]
    pub single_frame_ms: u32,
    #[knuffel(child, unwrap(argument), default = Self::default().motion_pause_speed)]
    pub motion_pause_speed: FloatOrInt<0, 100>,
    #[knuffel(child, unwrap(argument), default = Self::default().motion_pause_delay_ms)]
    pub motion_pause_delay_ms: u32,
    #[knuffel(child, default = Self::default().home_spring)]
    pub home_spring: SpringParams,
}

impl Default for Gestures {
    fn default() -> Self {
        Self {
            fling_threshold_velocity: FloatOrInt(500.),
            fling_min_velocity: FloatOrInt(250.),
            touch_slop: FloatOrInt(8.),
            transition_drag_length: FloatOrInt(1000.),
            drag_length_factor: FloatOrInt(1.),
            single_frame_ms: 16,
            motion_pause_speed: FloatOrInt(0.2),
            motion_pause_delay_ms: 150,
            home_spring: SpringParams::default(),
        }
    }
}

/// Parameters of the spring that carries a released window back home.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringParams {
    pub damping_ratio: f64,
    pub stiffness: u32,
    pub epsilon: f64,
}

impl Default for SpringParams {
    fn default() -> Self {
        Self {
            damping_ratio: 0.75,
            stiffness: 200,
            epsilon: 0.001,
        }
    }
}

impl<S> knuffel::Decode<S> for SpringParams
where
    S: knuffel::traits::ErrorSpan,
{
    fn decode_node(
        node: &knuffel::ast::SpannedNode<S>,
        ctx: &mut knuffel::decode::Context<S>,
    ) -> Result<Self, DecodeError<S>> {
        if let Some(type_name) = &node.type_name {
            ctx.emit_error(DecodeError::unexpected(
                type_name,
                "type name",
                "no type name expected for this node",
            ));
        }
        for val in node.arguments.iter() {
            ctx.emit_error(DecodeError::unexpected(
                &val.literal,
                "argument",
                "no arguments expected for this node",
            ));
        }
        for child in node.children() {
            ctx.emit_error(DecodeError::unexpected(
                child,
                "node",
                format!("unexpected node `{}`", child.node_name.escape_default()),
            ));
        }

        let mut damping_ratio = None;
        let mut stiffness = None;
        let mut epsilon = None;
        for (name, val) in &node.properties {
            match &***name {
                "damping-ratio" => {
                    damping_ratio = Some(knuffel::traits::DecodeScalar::decode(val, ctx)?);
                }
                "stiffness" => {
                    stiffness = Some(knuffel::traits::DecodeScalar::decode(val, ctx)?);
                }
                "epsilon" => {
                    epsilon = Some(knuffel::traits::DecodeScalar::decode(val, ctx)?);
                }
                name_str => {
                    ctx.emit_error(DecodeError::unexpected(
                        name,
                        "property",
                        format!("unexpected property `{}`", name_str.escape_default()),
                    ));
                }
            }
        }

        let damping_ratio = damping_ratio
            .ok_or_else(|| DecodeError::missing(node, "property `damping-ratio` is required"))?;
        let stiffness: u32 = stiffness
            .ok_or_else(|| DecodeError::missing(node, "property `stiffness` is required"))?;
        let epsilon = epsilon
            .ok_or_else(|| DecodeError::missing(node, "property `epsilon` is required"))?;

        let damping_ratio = parse_in_range(node, ctx, "damping-ratio", damping_ratio, 0.1..=10.);
        let epsilon = parse_in_range(node, ctx, "epsilon", epsilon, 0.00001..=0.1);
        if stiffness < 1 {
            ctx.emit_error(DecodeError::conversion(node, "stiffness must be >= 1"));
        }

        Ok(Self {
            damping_ratio,
            stiffness,
            epsilon,
        })
    }
}
