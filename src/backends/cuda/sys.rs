//! Raw cuFFT bindings.
//!
//! Only the entry points the benchmark needs. Status codes are returned as
//! plain `c_int` and translated by [`check`]. Data pointers are untyped; the
//! transform type chosen at plan time defines their element layout.

#![allow(non_camel_case_types, non_snake_case, dead_code)]

use std::ffi::{c_int, c_longlong, c_void};

use crate::error::{BenchError, Result};

pub type cufftHandle = c_int;
pub type cufftResult = c_int;
pub type cufftType = c_int;
pub type cudaDataType = c_int;
pub type cudaStream_t = *mut c_void;

pub const CUFFT_SUCCESS: cufftResult = 0;

pub const CUFFT_R2C: cufftType = 0x2a;
pub const CUFFT_C2R: cufftType = 0x2c;
pub const CUFFT_C2C: cufftType = 0x29;
pub const CUFFT_D2Z: cufftType = 0x6a;
pub const CUFFT_Z2D: cufftType = 0x6c;
pub const CUFFT_Z2Z: cufftType = 0x69;

pub const CUDA_R_16F: cudaDataType = 2;
pub const CUDA_C_16F: cudaDataType = 6;

pub const CUFFT_FORWARD: c_int = -1;
pub const CUFFT_INVERSE: c_int = 1;

#[link(name = "cufft")]
extern "C" {
    pub fn cufftCreate(plan: *mut cufftHandle) -> cufftResult;
    pub fn cufftDestroy(plan: cufftHandle) -> cufftResult;
    pub fn cufftSetStream(plan: cufftHandle, stream: cudaStream_t) -> cufftResult;
    pub fn cufftGetVersion(version: *mut c_int) -> cufftResult;

    pub fn cufftPlan1d(plan: *mut cufftHandle, nx: c_int, ty: cufftType, batch: c_int)
        -> cufftResult;
    pub fn cufftPlan2d(plan: *mut cufftHandle, nx: c_int, ny: c_int, ty: cufftType)
        -> cufftResult;
    pub fn cufftPlan3d(
        plan: *mut cufftHandle,
        nx: c_int,
        ny: c_int,
        nz: c_int,
        ty: cufftType,
    ) -> cufftResult;

    pub fn cufftMakePlanMany64(
        plan: cufftHandle,
        rank: c_int,
        n: *mut c_longlong,
        inembed: *mut c_longlong,
        istride: c_longlong,
        idist: c_longlong,
        onembed: *mut c_longlong,
        ostride: c_longlong,
        odist: c_longlong,
        ty: cufftType,
        batch: c_longlong,
        work_size: *mut usize,
    ) -> cufftResult;

    pub fn cufftXtMakePlanMany(
        plan: cufftHandle,
        rank: c_int,
        n: *mut c_longlong,
        inembed: *mut c_longlong,
        istride: c_longlong,
        idist: c_longlong,
        inputtype: cudaDataType,
        onembed: *mut c_longlong,
        ostride: c_longlong,
        odist: c_longlong,
        outputtype: cudaDataType,
        batch: c_longlong,
        work_size: *mut usize,
        executiontype: cudaDataType,
    ) -> cufftResult;

    pub fn cufftGetSize1d(
        plan: cufftHandle,
        nx: c_int,
        ty: cufftType,
        batch: c_int,
        work_size: *mut usize,
    ) -> cufftResult;
    pub fn cufftGetSize2d(
        plan: cufftHandle,
        nx: c_int,
        ny: c_int,
        ty: cufftType,
        work_size: *mut usize,
    ) -> cufftResult;
    pub fn cufftGetSize3d(
        plan: cufftHandle,
        nx: c_int,
        ny: c_int,
        nz: c_int,
        ty: cufftType,
        work_size: *mut usize,
    ) -> cufftResult;
    pub fn cufftGetSizeMany64(
        plan: cufftHandle,
        rank: c_int,
        n: *mut c_longlong,
        inembed: *mut c_longlong,
        istride: c_longlong,
        idist: c_longlong,
        onembed: *mut c_longlong,
        ostride: c_longlong,
        odist: c_longlong,
        ty: cufftType,
        batch: c_longlong,
        work_size: *mut usize,
    ) -> cufftResult;
    pub fn cufftXtGetSizeMany(
        plan: cufftHandle,
        rank: c_int,
        n: *mut c_longlong,
        inembed: *mut c_longlong,
        istride: c_longlong,
        idist: c_longlong,
        inputtype: cudaDataType,
        onembed: *mut c_longlong,
        ostride: c_longlong,
        odist: c_longlong,
        outputtype: cudaDataType,
        batch: c_longlong,
        work_size: *mut usize,
        executiontype: cudaDataType,
    ) -> cufftResult;

    pub fn cufftExecR2C(plan: cufftHandle, idata: *mut c_void, odata: *mut c_void) -> cufftResult;
    pub fn cufftExecC2R(plan: cufftHandle, idata: *mut c_void, odata: *mut c_void) -> cufftResult;
    pub fn cufftExecC2C(
        plan: cufftHandle,
        idata: *mut c_void,
        odata: *mut c_void,
        direction: c_int,
    ) -> cufftResult;
    pub fn cufftExecD2Z(plan: cufftHandle, idata: *mut c_void, odata: *mut c_void) -> cufftResult;
    pub fn cufftExecZ2D(plan: cufftHandle, idata: *mut c_void, odata: *mut c_void) -> cufftResult;
    pub fn cufftExecZ2Z(
        plan: cufftHandle,
        idata: *mut c_void,
        odata: *mut c_void,
        direction: c_int,
    ) -> cufftResult;
    pub fn cufftXtExec(
        plan: cufftHandle,
        input: *mut c_void,
        output: *mut c_void,
        direction: c_int,
    ) -> cufftResult;
}

pub fn status_name(code: cufftResult) -> &'static str {
    match code {
        0 => "CUFFT_SUCCESS",
        1 => "CUFFT_INVALID_PLAN",
        2 => "CUFFT_ALLOC_FAILED",
        3 => "CUFFT_INVALID_TYPE",
        4 => "CUFFT_INVALID_VALUE",
        5 => "CUFFT_INTERNAL_ERROR",
        6 => "CUFFT_EXEC_FAILED",
        7 => "CUFFT_SETUP_FAILED",
        8 => "CUFFT_INVALID_SIZE",
        9 => "CUFFT_UNALIGNED_DATA",
        10 => "CUFFT_INCOMPLETE_PARAMETER_LIST",
        11 => "CUFFT_INVALID_DEVICE",
        12 => "CUFFT_PARSE_ERROR",
        13 => "CUFFT_NO_WORKSPACE",
        14 => "CUFFT_NOT_IMPLEMENTED",
        15 => "CUFFT_LICENSE_ERROR",
        16 => "CUFFT_NOT_SUPPORTED",
        _ => "CUFFT_UNKNOWN_ERROR",
    }
}

/// Turns a cuFFT status into a backend error naming the failed call.
pub fn check(code: cufftResult, operation: &'static str) -> Result<()> {
    if code == CUFFT_SUCCESS {
        Ok(())
    } else {
        Err(BenchError::backend(
            "cuda",
            operation,
            format!("{} ({code})", status_name(code)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_have_names() {
        assert!(check(CUFFT_SUCCESS, "cufftPlan1d").is_ok());
        let err = check(2, "cufftPlan1d").unwrap_err();
        assert!(err.to_string().contains("CUFFT_ALLOC_FAILED"));
        assert_eq!(status_name(99), "CUFFT_UNKNOWN_ERROR");
    }
}
