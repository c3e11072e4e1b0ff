use utoipa::OpenApi;
use crate::modules::video::cleanup::DeleteOutcome;
use crate::modules::video::model::{JobRecord, JobStatus};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HLS Transcoder",
        description = "Upload videos, transcode them to HLS in the background and stream the result"
    ),
    paths(
        crate::modules::video::handler::upload_video,
        crate::modules::video::handler::list_videos,
        crate::modules::video::handler::get_video,
        crate::modules::video::handler::delete_video,
        crate::modules::video::handler::resubmit_video,
        crate::modules::video::stream_handler::get_manifest,
        crate::modules::video::stream_handler::get_segment,
        crate::modules::video::stream_handler::get_artifact,
    ),
    components(
        schemas(
            JobRecord, JobStatus, DeleteOutcome,
        )
    ),
    tags(
        (name = "Videos", description = "Upload and transcode job management"),
        (name = "Streaming", description = "HLS playlist and segment delivery")
    )
)]
pub struct ApiDoc;
