use crate::{camera::Camera, terrain_view::View};
use async_channel::{Receiver, SendError, Sender};
use bevy::{
    log::{debug, error},
    math::Mat4,
    tasks::{futures_lite::future, AsyncComputeTaskPool, Task, TaskPool},
};

enum PassSignal {
    Start {
        view: View,
        camera: Camera,
        water_level: f32,
    },
    Terminate,
}

/// Runs the per frame update of the reflection view on the async compute task pool.
///
/// The view is handed to a long lived task by [`ReflectionPass::start`] and comes back with
/// [`ReflectionPass::finish`]. Everything the task computed is observable once `finish` returns.
pub struct ReflectionPass {
    /// `None` while the pass is running.
    view: Option<View>,
    water_level: f32,
    start_sender: Sender<PassSignal>,
    done_receiver: Receiver<View>,
    task: Option<Task<()>>,
}

impl ReflectionPass {
    pub fn new(view: View, water_level: f32) -> Self {
        let (start_sender, start_receiver) = async_channel::bounded(1);
        let (done_sender, done_receiver) = async_channel::bounded(1);

        let task = AsyncComputeTaskPool::get_or_init(TaskPool::default).spawn(async move {
            while let Ok(PassSignal::Start {
                mut view,
                camera,
                water_level,
            }) = start_receiver.recv().await
            {
                view.reflect(&camera, water_level);
                view.update_visibility();

                if done_sender.send(view).await.is_err() {
                    break;
                }
            }

            debug!("Reflection pass terminated.");
        });

        Self {
            view: Some(view),
            water_level,
            start_sender,
            done_receiver,
            task: Some(task),
        }
    }

    pub fn water_level(&self) -> f32 {
        self.water_level
    }

    pub fn set_water_level(&mut self, water_level: f32) {
        self.water_level = water_level;
    }

    pub fn is_running(&self) -> bool {
        self.view.is_none()
    }

    /// The reflection view, or `None` while the pass is running.
    pub fn view(&self) -> Option<&View> {
        self.view.as_ref()
    }

    /// Replaces the projection of the reflection view, waiting for a running pass first.
    pub fn set_projection(&mut self, projection: Mat4, near: f32, far: f32) {
        self.wait().set_projection(projection, near, far);
    }

    /// Starts reflecting the `camera` and selecting the visible tiles of the reflection.
    pub fn start(&mut self, camera: &Camera) {
        let Some(view) = self.view.take() else {
            error!("The reflection pass was started while it was still running.");
            return;
        };

        let signal = PassSignal::Start {
            view,
            camera: camera.clone(),
            water_level: self.water_level,
        };

        if let Err(SendError(PassSignal::Start { view, .. })) = self.start_sender.send_blocking(signal)
        {
            error!("The reflection pass task is gone, skipping the reflection.");
            self.view = Some(view);
        }
    }

    /// Blocks until the running pass is done and returns the updated reflection view.
    pub fn finish(&mut self) -> &View {
        self.wait()
    }

    fn wait(&mut self) -> &mut View {
        let done_receiver = &self.done_receiver;

        self.view.get_or_insert_with(|| {
            done_receiver
                .recv_blocking()
                .unwrap_or_else(|_| panic!("the reflection pass stopped while it was running"))
        })
    }
}

impl Drop for ReflectionPass {
    fn drop(&mut self) {
        // a failed send means the task already stopped
        if self.start_sender.send_blocking(PassSignal::Terminate).is_err() {
            return;
        }

        if let Some(task) = self.task.take() {
            future::block_on(task);
        }
    }
}
