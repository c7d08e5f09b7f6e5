use glam::{Quat, Vec3};

use crate::scene::{FragmentNode, SceneFragment};

/// Keyframe values of one animation channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Keyframes {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
    Scale(Vec<Vec3>),
}

/// A keyframe track bound to one node of a fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// Index of the targeted node within the owning fragment.
    pub target: usize,
    pub timestamps: Vec<f32>,
    pub keyframes: Keyframes,
}

impl Channel {
    /// Resolves the keyframe pair bracketing `t` and the blend weight
    /// between them. Times outside the track clamp to its ends.
    fn segment(&self, t: f32) -> Option<(usize, usize, f32)> {
        let times = &self.timestamps;
        let last = times.len().checked_sub(1)?;
        if t <= times[0] {
            return Some((0, 0, 0.0));
        }
        if t >= times[last] {
            return Some((last, last, 0.0));
        }
        let next = times.partition_point(|&ts| ts <= t);
        let prev = next - 1;
        let span = times[next] - times[prev];
        let alpha = if span > f32::EPSILON {
            (t - times[prev]) / span
        } else {
            0.0
        };
        Some((prev, next, alpha))
    }

    /// Writes the interpolated value at `t` into the node's local transform.
    pub fn apply(&self, t: f32, node: &mut FragmentNode) {
        let Some((prev, next, alpha)) = self.segment(t) else {
            return;
        };
        match &self.keyframes {
            Keyframes::Translation(values) => {
                if let (Some(a), Some(b)) = (values.get(prev), values.get(next)) {
                    node.translation = a.lerp(*b, alpha);
                }
            }
            Keyframes::Rotation(values) => {
                if let (Some(a), Some(b)) = (values.get(prev), values.get(next)) {
                    node.rotation = a.slerp(*b, alpha).normalize();
                }
            }
            Keyframes::Scale(values) => {
                if let (Some(a), Some(b)) = (values.get(prev), values.get(next)) {
                    node.scale = a.lerp(*b, alpha);
                }
            }
        }
    }
}

/// Named set of keyframe channels embedded in a loaded model.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub channels: Vec<Channel>,
}

impl AnimationClip {
    /// Clip length: the largest timestamp across all channels.
    pub fn duration(&self) -> f32 {
        self.channels
            .iter()
            .filter_map(|channel| channel.timestamps.last())
            .fold(0.0f32, |acc, &ts| acc.max(ts))
    }

    pub fn find_by_name<'a>(clips: &'a [AnimationClip], name: &str) -> Option<&'a AnimationClip> {
        clips.iter().find(|clip| clip.name == name)
    }
}

/// Drives one clip in continuous looping playback over a fragment.
///
/// Elapsed time accumulates exactly; wrapping into the clip's duration only
/// happens at sampling time, so accumulated playback time never drifts.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationMixer {
    clip: AnimationClip,
    time: f32,
}

impl AnimationMixer {
    pub fn new(clip: AnimationClip) -> Self {
        Self { clip, time: 0.0 }
    }

    /// Advances playback by the frame delta, in seconds.
    pub fn update(&mut self, dt: f32) {
        self.time += dt;
    }

    /// Total accumulated playback time.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn clip_name(&self) -> &str {
        &self.clip.name
    }

    /// Playback position within the clip after loop wrapping.
    pub fn wrapped_time(&self) -> f32 {
        let duration = self.clip.duration();
        if duration > f32::EPSILON {
            self.time.rem_euclid(duration)
        } else {
            0.0
        }
    }

    /// Samples the clip at the current position and writes the resulting
    /// local transforms into the fragment's nodes. Channels that target a
    /// node index outside the fragment are skipped.
    pub fn apply_to(&self, fragment: &mut SceneFragment) {
        let t = self.wrapped_time();
        for channel in &self.clip.channels {
            if let Some(node) = fragment.nodes.get_mut(channel.target) {
                channel.apply(t, node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::FragmentNode;

    fn spin_clip(name: &str) -> AnimationClip {
        AnimationClip {
            name: name.into(),
            channels: vec![
                Channel {
                    target: 0,
                    timestamps: vec![0.0, 1.0],
                    keyframes: Keyframes::Translation(vec![
                        Vec3::ZERO,
                        Vec3::new(4.0, 0.0, 0.0),
                    ]),
                },
                Channel {
                    target: 0,
                    timestamps: vec![0.0, 1.0],
                    keyframes: Keyframes::Rotation(vec![
                        Quat::IDENTITY,
                        Quat::from_rotation_y(std::f32::consts::PI),
                    ]),
                },
            ],
        }
    }

    fn fragment() -> SceneFragment {
        SceneFragment {
            name: "c1".into(),
            nodes: vec![FragmentNode::new("c1")],
            clips: Vec::new(),
        }
    }

    #[test]
    fn time_accumulates_exactly() {
        let mut mixer = AnimationMixer::new(spin_clip("c1-action"));
        let deltas = [0.0f32, 0.016, 0.033];
        for dt in deltas {
            mixer.update(dt);
        }
        let expected: f32 = deltas.iter().sum();
        assert!((mixer.time() - expected).abs() < 1e-6);
    }

    #[test]
    fn playback_loops_past_the_clip_end() {
        let mut mixer = AnimationMixer::new(spin_clip("c1-action"));
        mixer.update(1.25);
        assert!((mixer.wrapped_time() - 0.25).abs() < 1e-6);

        let mut fragment = fragment();
        mixer.apply_to(&mut fragment);
        let node = &fragment.nodes[0];
        assert!((node.translation.x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn sampling_interpolates_between_keyframes() {
        let mut mixer = AnimationMixer::new(spin_clip("c1-action"));
        mixer.update(0.5);
        let mut fragment = fragment();
        mixer.apply_to(&mut fragment);
        let node = &fragment.nodes[0];
        assert!((node.translation.x - 2.0).abs() < 1e-5);
        let (_, angle) = node.rotation.to_axis_angle();
        assert!((angle - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
    }

    #[test]
    fn sampling_clamps_outside_the_track() {
        let clip = spin_clip("c1-action");
        let channel = &clip.channels[0];
        let mut node = FragmentNode::new("c1");
        channel.apply(-1.0, &mut node);
        assert_eq!(node.translation, Vec3::ZERO);
        channel.apply(5.0, &mut node);
        assert_eq!(node.translation, Vec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn channels_targeting_missing_nodes_are_skipped() {
        let mut clip = spin_clip("c1-action");
        clip.channels[0].target = 7;
        clip.channels[1].target = 9;
        let mut mixer = AnimationMixer::new(clip);
        mixer.update(0.5);
        let mut fragment = fragment();
        mixer.apply_to(&mut fragment);
        assert_eq!(fragment.nodes[0].translation, Vec3::ZERO);
    }

    #[test]
    fn clips_are_found_by_naming_convention() {
        let clips = vec![spin_clip("c1-action"), spin_clip("c2-action")];
        assert!(AnimationClip::find_by_name(&clips, "c2-action").is_some());
        assert!(AnimationClip::find_by_name(&clips, "c9-action").is_none());
    }
}
