pub mod map_reader;
pub mod marker_filter;
pub mod model_file;
pub mod output_writer;
pub mod sample_filter;
pub mod vcf_reader;
