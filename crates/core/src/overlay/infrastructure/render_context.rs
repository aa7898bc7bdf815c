use std::marker::PhantomData;
use std::thread::{self, ThreadId};

use crossbeam_channel::{Receiver, Sender};

use crate::overlay::domain::overlay_mapper::OverlayMapper;
use crate::overlay::domain::overlay_surface::OverlaySurface;
use crate::shared::bounding_box::BoundingBox;

/// Work queued for the rendering context.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderCommand {
    Present {
        frame_width: u32,
        frame_height: u32,
        boxes: Vec<BoundingBox>,
    },
    Clear,
    Shutdown,
}

/// Owns the overlay surface and applies overlay updates on its own thread.
///
/// The context is pinned to the thread that created it (`!Send`). Other
/// threads go through a [`RenderHandle`], whose updates wait in a FIFO
/// queue until the next [`pump`](Self::pump). Direct calls drain that queue
/// first, so every update lands in the order it was made.
pub struct RenderContext<S: OverlaySurface> {
    surface: S,
    mapper: OverlayMapper,
    sender: Sender<RenderCommand>,
    receiver: Receiver<RenderCommand>,
    owner: ThreadId,
    presented: usize,
    _pinned: PhantomData<*const ()>,
}

impl<S: OverlaySurface> RenderContext<S> {
    /// Binds the context to the calling thread.
    pub fn new(surface: S, mapper: OverlayMapper) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            surface,
            mapper,
            sender,
            receiver,
            owner: thread::current().id(),
            presented: 0,
            _pinned: PhantomData,
        }
    }

    pub fn handle(&self) -> RenderHandle {
        RenderHandle {
            sender: self.sender.clone(),
            owner: self.owner,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn presented(&self) -> usize {
        self.presented
    }

    /// Maps `boxes` with the display size read right now and replaces the
    /// overlay, after anything already queued.
    pub fn present(&mut self, frame_width: u32, frame_height: u32, boxes: &[BoundingBox]) {
        self.pump();
        self.replace(frame_width, frame_height, boxes);
    }

    pub fn clear(&mut self) {
        self.pump();
        self.surface.clear_overlay();
    }

    /// Applies the commands queued so far without blocking. Returns how many
    /// were taken off the queue; `Shutdown` stops the drain.
    pub fn pump(&mut self) -> usize {
        // Bounded by the backlog at entry so a busy producer cannot starve
        // the caller.
        let backlog = self.receiver.len();
        let mut applied = 0;
        while applied < backlog {
            let Ok(command) = self.receiver.try_recv() else {
                break;
            };
            applied += 1;
            if !self.apply(command) {
                break;
            }
        }
        applied
    }

    /// Blocks applying commands until a `Shutdown` arrives.
    pub fn run(&mut self) {
        while let Ok(command) = self.receiver.recv() {
            if !self.apply(command) {
                break;
            }
        }
    }

    fn apply(&mut self, command: RenderCommand) -> bool {
        match command {
            RenderCommand::Present {
                frame_width,
                frame_height,
                boxes,
            } => self.replace(frame_width, frame_height, &boxes),
            RenderCommand::Clear => self.surface.clear_overlay(),
            RenderCommand::Shutdown => return false,
        }
        true
    }

    fn replace(&mut self, frame_width: u32, frame_height: u32, boxes: &[BoundingBox]) {
        let (display_w, display_h) = self.surface.display_size();
        let mapped = self
            .mapper
            .map(boxes, frame_width, frame_height, display_w, display_h);
        log::debug!(
            "Overlay: {} boxes on {display_w}x{display_h} display",
            mapped.len()
        );
        self.surface.replace_overlay(&mapped);
        self.presented += 1;
    }
}

/// Cloneable, `Send` entry point into a [`RenderContext`].
#[derive(Clone, Debug)]
pub struct RenderHandle {
    sender: Sender<RenderCommand>,
    owner: ThreadId,
}

impl RenderHandle {
    pub fn is_render_context(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Queues an overlay update. Returns `false` once the context is gone.
    pub fn present(&self, frame_width: u32, frame_height: u32, boxes: Vec<BoundingBox>) -> bool {
        self.send(RenderCommand::Present {
            frame_width,
            frame_height,
            boxes,
        })
    }

    pub fn clear(&self) -> bool {
        self.send(RenderCommand::Clear)
    }

    pub fn shutdown(&self) -> bool {
        self.send(RenderCommand::Shutdown)
    }

    fn send(&self, command: RenderCommand) -> bool {
        self.sender.send(command).is_ok()
    }
}
