// Console stand-in for the feedback display
//
// Tracks which scene elements would be visible and logs every change. Glow
// and value updates arrive at stream rate and are logged at debug level.

use neurofb_core::{Condition, Event, Topic};
use neurofb_experiment::EventBusBuilder;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub fixation_cross: bool,
    pub arrow: Option<Condition>,
    pub brain: bool,
    pub glow: Option<Glow>,
    pub region_values: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glow {
    pub intensity: f32,
    pub correct: bool,
}

#[derive(Debug, Clone)]
pub struct ConsoleRenderer {
    scene: Arc<Mutex<Scene>>,
    show_feedback: bool,
}

impl ConsoleRenderer {
    pub fn new(show_feedback: bool) -> Self {
        Self {
            scene: Arc::new(Mutex::new(Scene::default())),
            show_feedback,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Scene> {
        self.scene.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn scene(&self) -> Scene {
        self.lock().clone()
    }

    pub fn subscribe(&self, builder: &mut EventBusBuilder) {
        for topic in [
            Topic::SessionStarted,
            Topic::SessionFinished,
            Topic::Reference,
            Topic::Cue,
            Topic::Feedback,
            Topic::TrialEnd,
            Topic::Reset,
            Topic::GlowUpdate,
            Topic::ValueUpdate,
        ] {
            let renderer = self.clone();
            builder.subscribe(topic, move |event| {
                renderer.apply(event);
                Ok(())
            });
        }
    }

    fn apply(&self, event: &Event) {
        let mut scene = self.lock();
        match event {
            Event::SessionStarted => println!("== session started =="),
            Event::SessionFinished => {
                *scene = Scene::default();
                println!("== session finished ==");
            }
            Event::Reference => {
                scene.fixation_cross = true;
                println!("  +");
            }
            Event::Cue(condition) => {
                scene.arrow = Some(*condition);
                match condition {
                    Condition::LeftHand => println!("  <-"),
                    Condition::RightHand => println!("  ->"),
                }
            }
            Event::Feedback(_) if self.show_feedback => {
                scene.fixation_cross = false;
                scene.brain = true;
                println!("  [feedback]");
            }
            Event::TrialEnd | Event::Reset => *scene = Scene::default(),
            Event::GlowUpdate { intensity, correct } => {
                if scene.brain {
                    scene.glow = Some(Glow {
                        intensity: *intensity,
                        correct: *correct,
                    });
                    log::debug!(
                        "glow {:.2} ({})",
                        intensity,
                        if *correct { "correct" } else { "wrong" }
                    );
                }
            }
            Event::ValueUpdate(values) => {
                if scene.brain {
                    scene.region_values.clone_from(values);
                    log::debug!("regions {:?}", values);
                }
            }
            _ => {}
        }
    }
}
