use grid_codec::{BoundingBox, GridGeometry, OutputDecoder, Selection, TargetEncoder};

fn main() {
    let grid = GridGeometry::REFERENCE;

    let boxes = [
        BoundingBox::xywh(300.0, 220.0, 40.0, 40.0),
        BoundingBox::xywh(12.0, 400.0, 64.0, 48.0),
    ];

    let target = TargetEncoder::new(grid).encode(&boxes);

    let decoded = OutputDecoder::new(grid)
        .decode_image(target.view(), Selection::TopK(boxes.len()))
        .expect("target matches the grid");

    println!("{decoded:#?}");
}
